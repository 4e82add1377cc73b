mod screw_results;
